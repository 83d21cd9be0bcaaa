//! Command handler for the interactive shell

use anyhow::{anyhow, bail, Result};
use notecache::{CacheKind, CancellationToken, Notebooks, ProgressSink};
use notestore::ContainerNode;
use std::fmt::Write;
use std::sync::Arc;

/// One parsed shell command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Roots,
    Select(String),
    Current,
    Tree,
    Children(String),
    Find(String),
    Resolve(String),
    Create(String),
    Delete { item: String, owner: Option<String> },
    Move { target: String, source: Option<String> },
    Copy(String),
    Clear,
    Stats,
    Help,
}

impl Command {
    /// Parse a command line; the first word is case-insensitive
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let mut args = rest.split_whitespace();

        let required = |what: &str| -> Result<String> {
            if rest.is_empty() {
                bail!("missing {}", what)
            }
            Ok(rest.to_string())
        };

        let command = match word.to_uppercase().as_str() {
            "ROOTS" => Command::Roots,
            "SELECT" => Command::Select(required("root name or id")?),
            "CURRENT" => Command::Current,
            "TREE" => Command::Tree,
            "CHILDREN" => Command::Children(required("container id")?),
            "FIND" => Command::Find(required("page title")?),
            "RESOLVE" => Command::Resolve(required("id")?),
            "CREATE" => Command::Create(required("container id")?),
            "DELETE" => Command::Delete {
                item: args.next().ok_or_else(|| anyhow!("missing item id"))?.to_string(),
                owner: args.next().map(str::to_string),
            },
            "MOVE" => Command::Move {
                target: args.next().ok_or_else(|| anyhow!("missing target id"))?.to_string(),
                source: args.next().map(str::to_string),
            },
            "COPY" => Command::Copy(required("target id")?),
            "CLEAR" => Command::Clear,
            "STATS" => Command::Stats,
            "HELP" => Command::Help,
            "" => bail!("empty command"),
            other => bail!("unknown command '{}'", other.to_lowercase()),
        };
        Ok(command)
    }
}

pub struct CommandHandler {
    notebooks: Arc<Notebooks>,
    progress: Arc<dyn ProgressSink>,
}

impl CommandHandler {
    pub fn new(notebooks: Arc<Notebooks>, progress: Arc<dyn ProgressSink>) -> Self {
        Self {
            notebooks,
            progress,
        }
    }

    pub async fn handle(&self, cmd: Command, cancel: &CancellationToken) -> Result<String> {
        match cmd {
            Command::Roots => self.handle_roots(cancel).await,
            Command::Select(name) => {
                let root = self.notebooks.select_root_by(&name, cancel).await?;
                Ok(format!("Selected {} ({})", root.display_name, root.id))
            }
            Command::Current => Ok(match (self.notebooks.root_id(), self.notebooks.root_name()) {
                (Some(id), Some(name)) => format!("{} ({})", name, id),
                _ => "No root selected".to_string(),
            }),
            Command::Tree => self.handle_tree(cancel).await,
            Command::Children(id) => self.handle_children(&id, cancel).await,
            Command::Find(title) => self.handle_find(&title, cancel).await,
            Command::Resolve(id) => Ok(match self.notebooks.resolve_name(&id).await {
                Some(name) => name,
                None => format!("Name unavailable for {}", id),
            }),
            Command::Create(container) => {
                self.notebooks.invalidate_on_create(&container);
                Ok("OK".to_string())
            }
            Command::Delete { item, owner } => {
                self.notebooks.invalidate_on_delete(&item, owner.as_deref());
                Ok("OK".to_string())
            }
            Command::Move { target, source } => {
                self.notebooks.invalidate_on_move(source.as_deref(), &target);
                Ok("OK".to_string())
            }
            Command::Copy(target) => {
                self.notebooks.invalidate_on_copy(&target);
                Ok("OK".to_string())
            }
            Command::Clear => {
                self.notebooks.clear_all();
                Ok("OK".to_string())
            }
            Command::Stats => self.handle_stats(),
            Command::Help => Ok(HELP.to_string()),
        }
    }

    async fn handle_roots(&self, cancel: &CancellationToken) -> Result<String> {
        let selected = self.notebooks.root_id();
        let mut out = String::new();
        for root in self.notebooks.list_roots(cancel).await? {
            let marker = if selected.as_deref() == Some(root.id.as_str()) { "*" } else { " " };
            writeln!(out, "{} {} ({})", marker, root.display_name, root.id)?;
        }
        Ok(out.trim_end().to_string())
    }

    async fn handle_tree(&self, cancel: &CancellationToken) -> Result<String> {
        let (tree, hit) = self
            .notebooks
            .selected_tree(self.progress.as_ref(), cancel)
            .await?;
        let mut out = String::new();
        render_tree(&tree, 0, &mut out)?;
        writeln!(out, "({})", source_label(hit))?;
        Ok(out.trim_end().to_string())
    }

    async fn handle_children(&self, id: &str, cancel: &CancellationToken) -> Result<String> {
        let (items, hit) = self.notebooks.get_or_fetch_children(id, cancel).await?;
        let mut out = String::new();
        for item in &items {
            writeln!(out, "{}  {}", item.id, item.title)?;
        }
        writeln!(out, "({} pages, {})", items.len(), source_label(hit))?;
        Ok(out.trim_end().to_string())
    }

    async fn handle_find(&self, title: &str, cancel: &CancellationToken) -> Result<String> {
        let (result, hit) = self
            .notebooks
            .find_item(title, self.progress.as_ref(), cancel)
            .await?;
        let line = match result.item {
            Some(item) if result.found => format!("{}  {} (in {})", item.id, item.title, result.owner_id),
            _ => format!("No page titled '{}'", title),
        };
        Ok(format!("{}\n({})", line, source_label(hit)))
    }

    fn handle_stats(&self) -> Result<String> {
        let store = self.notebooks.store();
        let stats = store.stats();
        let mut out = String::new();
        writeln!(out, "root:{}", store.root_id().unwrap_or_else(|| "-".to_string()))?;
        writeln!(out, "ttl_secs:{}", store.ttl().as_secs())?;
        writeln!(out, "cached_child_lists:{}", store.children_len())?;
        for kind in CacheKind::ALL {
            let s = stats.kind(kind);
            writeln!(
                out,
                "{}: hits={} stale={} misses={} inserts={} invalidations={}",
                kind, s.hits, s.stale, s.misses, s.inserts, s.invalidations
            )?;
        }
        write!(out, "hit_ratio:{:.2}", stats.hit_ratio())?;
        Ok(out)
    }
}

fn source_label(hit: bool) -> &'static str {
    if hit {
        "cached"
    } else {
        "fetched"
    }
}

fn render_tree(nodes: &[ContainerNode], depth: usize, out: &mut String) -> std::fmt::Result {
    for node in nodes {
        let indent = "  ".repeat(depth);
        match node.children() {
            Some(children) => {
                writeln!(out, "{}+ {} [{}]", indent, node.name(), node.id())?;
                render_tree(children, depth + 1, out)?;
            }
            None => writeln!(out, "{}- {} [{}]", indent, node.name(), node.id())?,
        }
    }
    Ok(())
}

const HELP: &str = "\
roots                     list notebooks
select <name|id>          select a notebook
current                   show the selected notebook
tree                      show sections and section groups
children <section>        list pages of a section
find <title>              find a page by title
resolve <id>              show the name of an id
create <section>          note that a page was created
delete <page> [section]   note that a page was deleted
move <target> [source]    note that a page was moved
copy <target>             note that a page was copied
clear                     drop all caches
stats                     cache statistics";
