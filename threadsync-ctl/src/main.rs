use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use futures::channel::mpsc;
use threadsync_client::{
    api::CommentId, CommentTree, IdentityCell, IdentityProvider, SideEffect, SyncController,
};

#[derive(structopt::StructOpt)]
struct Opt {
    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// Replay a recorded feed and print the resulting tree and side effects
    Replay {
        /// File with one raw feed message per line
        file: PathBuf,

        /// Act as if the viewer was typing a reply the whole time
        #[structopt(long)]
        composing: bool,
    },

    /// Replay a recorded feed and print the resulting tree as nested JSON
    Tree {
        /// File with one raw feed message per line
        file: PathBuf,
    },
}

struct Replayed {
    controller: SyncController,
    identity: IdentityCell,
    effects: Vec<SideEffect>,
}

fn replay(file: &Path, composing: bool) -> anyhow::Result<Replayed> {
    let feed = std::fs::read_to_string(file)
        .with_context(|| format!("reading recorded feed {file:?}"))?;
    Ok(replay_feed(&feed, composing))
}

fn replay_feed(feed: &str, composing: bool) -> Replayed {
    let (identity, _changes) = IdentityCell::new();
    let (sender, mut receiver) = mpsc::unbounded();
    let mut controller = SyncController::new(Arc::new(identity.clone()), sender);
    controller.set_composing(composing);

    for (lineno, line) in feed.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match controller.handle_message(line) {
            Ok(outcomes) => tracing::debug!(line = lineno + 1, ?outcomes, "replayed message"),
            Err(err) => tracing::warn!(line = lineno + 1, %err, "skipping malformed message"),
        }
    }

    let mut effects = Vec::new();
    while let Ok(e) = receiver.try_recv() {
        effects.push(e);
    }
    Replayed {
        controller,
        identity,
        effects,
    }
}

fn print_tree(tree: &CommentTree) {
    let mut pending = tree
        .root_ids()
        .iter()
        .rev()
        .map(|id| (*id, 0))
        .collect::<Vec<(CommentId, usize)>>();
    while let Some((id, depth)) = pending.pop() {
        let Some(node) = tree.get(id) else {
            continue;
        };
        let c = node.comment();
        let author = c.user_name.as_deref().unwrap_or("?");
        println!("{:indent$}#{} [{}] {}", "", c.id, author, c.text, indent = depth * 2);
        pending.extend(node.children().iter().rev().map(|child| (*child, depth + 1)));
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let opt = <Opt as structopt::StructOpt>::from_args();

    match opt.cmd {
        Command::Replay { file, composing } => {
            let res = replay(&file, composing)?;
            print_tree(res.controller.tree());
            let renders = res
                .effects
                .iter()
                .filter(|e| matches!(e, SideEffect::Render(_)))
                .count();
            println!("renders: {renders}");
            for e in &res.effects {
                if let SideEffect::Focus(id) = e {
                    println!("focus: #{id}");
                }
            }
            match res.identity.get_identity() {
                Some(user) => println!("identity: {} ({:?})", user.name, user.id),
                None => println!("identity: none"),
            }
        }
        Command::Tree { file } => {
            let res = replay(&file, false)?;
            let nested = res.controller.tree().to_nested();
            println!(
                "{}",
                serde_json::to_string_pretty(&nested).context("serializing tree")?
            );
        }
    }

    Ok(())
}
