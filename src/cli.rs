// CLI layer: argument definitions and dispatch. Parsing is clap's job;
// `dispatch` turns a parsed command into client calls and hands the results
// to `ui`.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use crate::api::TodoClient;
use crate::attachments::AttachmentSource;
use crate::auth::{code_from_redirect, OAuthClient, TokenStore};
use crate::config::Config;
use crate::resolver::{ListRef, TaskRef};
use crate::session::Session;
use crate::ui;

#[derive(Parser, Debug)]
#[command(name = "todo", version, about = "Microsoft To Do from the command line")]
pub struct Cli {
    /// Log requests and decisions to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Where a command's task lives: list by name (default list if omitted),
/// task by name or `--id`.
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct TaskTarget {
    /// Name of the task
    #[arg(value_name = "TASK_NAME", required_unless_present = "task_id", conflicts_with = "task_id")]
    pub task_name: Option<String>,

    #[command(flatten)]
    pub scope: Scope,
}

/// List/id/json flags shared by every task command.
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct Scope {
    /// List containing the task (defaults to the default list)
    #[arg(short, long)]
    pub list: Option<String>,

    /// Address the task by its ID instead of its name
    #[arg(long = "id", value_name = "TASK_ID")]
    pub task_id: Option<String>,

    /// Print machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show all lists
    Ls {
        #[arg(long)]
        json: bool,
    },

    /// Show the tasks of a list
    Lst {
        /// List name (defaults to the default list)
        list: Option<String>,
        #[arg(long)]
        json: bool,
    },

    /// Create a task, optionally with an attachment
    New {
        task_name: String,
        /// File to attach to the new task
        #[arg(short = 'A', long = "attach", value_name = "FILE_PATH")]
        attach: Option<PathBuf>,
        /// List to create the task in
        #[arg(short, long)]
        list: Option<String>,
        #[arg(long)]
        json: bool,
    },

    /// Attach a file to a task
    Attach {
        /// TASK_NAME FILE_PATH, or just FILE_PATH together with --id
        #[arg(value_name = "TASK_NAME FILE_PATH", num_args = 1..=2, required = true)]
        args: Vec<String>,
        #[command(flatten)]
        scope: Scope,
    },

    /// List a task's attachments
    Attachments {
        #[command(flatten)]
        target: TaskTarget,
    },

    /// Remove one attachment (--index) or all of them from a task
    Detach {
        #[command(flatten)]
        target: TaskTarget,
        /// Position as shown by `attachments`
        #[arg(long = "index", value_name = "N")]
        att_index: Option<usize>,
    },

    /// Save one attachment (--index) or all of them to disk
    Download {
        #[command(flatten)]
        target: TaskTarget,
        /// Position as shown by `attachments`
        #[arg(long = "index", value_name = "N")]
        att_index: Option<usize>,
        /// Directory to write files into
        #[arg(short, long, value_name = "OUTPUT_DIR", default_value = ".")]
        output: PathBuf,
    },

    /// Set a task's note
    Note {
        /// TASK_NAME CONTENT, or just CONTENT together with --id
        #[arg(value_name = "TASK_NAME CONTENT", num_args = 1..=2, required = true)]
        args: Vec<String>,
        #[command(flatten)]
        scope: Scope,
    },

    /// Print a task's note
    #[command(name = "show-note", alias = "sn")]
    ShowNote {
        #[command(flatten)]
        target: TaskTarget,
    },

    /// Remove a task's note
    #[command(name = "clear-note", alias = "cn")]
    ClearNote {
        #[command(flatten)]
        target: TaskTarget,
    },

    /// Sign in with a Microsoft account
    Login,

    /// Forget the stored sign-in
    Logout,
}

impl Command {
    pub fn wants_json(&self) -> bool {
        match self {
            Command::Ls { json } | Command::Lst { json, .. } | Command::New { json, .. } => *json,
            Command::Attach { scope, .. } | Command::Note { scope, .. } => scope.json,
            Command::Attachments { target }
            | Command::Detach { target, .. }
            | Command::Download { target, .. }
            | Command::ShowNote { target }
            | Command::ClearNote { target } => target.scope.json,
            Command::Login | Command::Logout => false,
        }
    }

    /// Commands that talk to the API need a signed-in session.
    pub fn needs_session(&self) -> bool {
        !matches!(self, Command::Login | Command::Logout)
    }
}

impl Scope {
    fn list_ref(&self) -> ListRef {
        ListRef::from_name(self.list.clone())
    }

    /// Builds the task reference from a positional name and `--id`.
    fn task_ref(&self, task_name: Option<&str>) -> Result<TaskRef> {
        match (task_name, &self.task_id) {
            (Some(_), Some(_)) => bail!("give either a task name or --id, not both"),
            (Some(name), None) => Ok(TaskRef::Name(name.to_string())),
            (None, Some(id)) => Ok(TaskRef::Id(id.clone())),
            (None, None) => bail!("a task name or --id is required"),
        }
    }

    /// Splits `[TASK_NAME] VALUE` positionals: with `--id` only the value
    /// is given. `what` names the value in errors.
    fn split_positionals(&self, args: &[String], what: &str) -> Result<(TaskRef, String)> {
        match args {
            [name] if self.task_id.is_none() => bail!("missing {what} for task '{name}'"),
            [value] => Ok((self.task_ref(None)?, value.clone())),
            [name, value] => Ok((self.task_ref(Some(name))?, value.clone())),
            _ => bail!("expected a task name followed by one value"),
        }
    }
}

impl TaskTarget {
    fn refs(&self) -> Result<(ListRef, TaskRef)> {
        Ok((self.scope.list_ref(), self.scope.task_ref(self.task_name.as_deref())?))
    }
}

/// Runs the commands that need no API session.
pub fn run_local(command: &Command, config: &Config) -> Result<()> {
    match command {
        Command::Login => {
            let oauth = OAuthClient::from_config(config)?;
            let redirect = ui::prompt_redirect_url(&oauth.authorization_url()?)?;
            let code = code_from_redirect(&redirect)?;
            let token = oauth.exchange_code(&code)?;
            let store = TokenStore::new(config.token_path());
            store.save(&token)?;
            println!("Signed in. Token stored in {}", store.path().display());
        }
        Command::Logout => {
            if TokenStore::new(config.token_path()).clear()? {
                println!("Signed out.");
            } else {
                println!("Not signed in.");
            }
        }
        other => bail!("command {other:?} needs an API session"),
    }
    Ok(())
}

/// Executes an API command against `client`.
pub fn dispatch<S: Session>(client: &TodoClient<S>, command: Command) -> Result<()> {
    debug!(?command, "dispatching");
    match command {
        Command::Ls { json } => {
            let lists = client.get_lists()?;
            ui::print_lists(&lists, json);
        }
        Command::Lst { list, json } => {
            let list = client.resolve_list(&ListRef::from_name(list))?;
            let tasks = client.get_tasks(&list.id)?;
            ui::print_tasks(&list, &tasks, json);
        }
        Command::New {
            task_name,
            attach,
            list,
            json,
        } => {
            // Validate the file before the task exists.
            let source = attach.map(AttachmentSource::open).transpose()?;
            let list = client.resolve_list(&ListRef::from_name(list))?;
            let task = client.create_task(&list.id, &task_name)?;
            let created = match source {
                Some(source) => {
                    let bar = ui::upload_bar(&source.name, source.size);
                    let result = client.upload(&source, &list.id, &task, &mut |sent, _| {
                        bar.set_position(sent)
                    });
                    bar.finish_and_clear();
                    Some(result?)
                }
                None => None,
            };
            ui::print_task_created(&task, created.as_ref(), json);
        }
        Command::Attach { args, scope } => {
            let (task, file_path) = scope.split_positionals(&args, "file path")?;
            let source = AttachmentSource::open(&file_path)?;
            let bar = ui::upload_bar(&source.name, source.size);
            let result = client.create_attachment_with_progress(
                &file_path,
                &scope.list_ref(),
                &task,
                &mut |sent, _| bar.set_position(sent),
            );
            bar.finish_and_clear();
            ui::print_attached(&result?, scope.json);
        }
        Command::Attachments { target } => {
            let (list, task) = target.refs()?;
            let attachments = client.get_attachments(&list, &task)?;
            ui::print_attachments(&attachments, target.scope.json);
        }
        Command::Detach { target, att_index } => {
            let (list, task) = target.refs()?;
            let deleted = client.delete_attachment(&list, &task, att_index)?;
            ui::print_detached(&deleted, target.scope.json);
        }
        Command::Download {
            target,
            att_index,
            output,
        } => {
            let (list, task) = target.refs()?;
            let spinner = ui::spinner("Downloading...");
            let result = client.download_attachment(&list, &task, att_index, &output);
            spinner.finish_and_clear();
            ui::print_downloaded(&result?, target.scope.json);
        }
        Command::Note { args, scope } => {
            let (task, content) = scope.split_positionals(&args, "note content")?;
            let updated = client.set_note(&scope.list_ref(), &task, &content)?;
            ui::print_note_updated(&updated, false, scope.json);
        }
        Command::ShowNote { target } => {
            let (list, task) = target.refs()?;
            let task = client.show_note(&list, &task)?;
            ui::print_note(&task, target.scope.json);
        }
        Command::ClearNote { target } => {
            let (list, task) = target.refs()?;
            let updated = client.clear_note(&list, &task)?;
            ui::print_note_updated(&updated, true, target.scope.json);
        }
        Command::Login | Command::Logout => bail!("command needs no API session"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Command {
        Cli::try_parse_from(std::iter::once("todo").chain(args.iter().copied()))
            .unwrap()
            .command
    }

    fn target_of(command: Command) -> TaskTarget {
        match command {
            Command::Attachments { target }
            | Command::Detach { target, .. }
            | Command::Download { target, .. }
            | Command::ShowNote { target }
            | Command::ClearNote { target } => target,
            other => panic!("no task target on {other:?}"),
        }
    }

    #[test]
    fn attach_with_name_and_path() {
        match parse(&["attach", "Buy groceries", "/tmp/list.txt", "-l", "Shopping", "--json"]) {
            Command::Attach { args, scope } => {
                let (task, path) = scope.split_positionals(&args, "file path").unwrap();
                assert_eq!(task, TaskRef::Name("Buy groceries".into()));
                assert_eq!(path, "/tmp/list.txt");
                assert_eq!(scope.list.as_deref(), Some("Shopping"));
                assert!(scope.json);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn attach_with_id_takes_only_the_path() {
        match parse(&["attach", "--id", "task123", "/tmp/list.txt"]) {
            Command::Attach { args, scope } => {
                let (task, path) = scope.split_positionals(&args, "file path").unwrap();
                assert_eq!(task, TaskRef::Id("task123".into()));
                assert_eq!(path, "/tmp/list.txt");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn attach_with_name_and_id_is_rejected() {
        match parse(&["attach", "Buy groceries", "/tmp/list.txt", "--id", "task123"]) {
            Command::Attach { args, scope } => assert!(scope.split_positionals(&args, "file path").is_err()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn attachments_by_name_or_id() {
        let target = target_of(parse(&["attachments", "Buy groceries", "-l", "Shopping"]));
        assert_eq!(target.task_name.as_deref(), Some("Buy groceries"));
        assert_eq!(target.scope.list.as_deref(), Some("Shopping"));

        let target = target_of(parse(&["attachments", "--id", "task123", "--json"]));
        assert_eq!(target.scope.task_id.as_deref(), Some("task123"));
        assert!(target.scope.json);
        assert_eq!(target.refs().unwrap().1, TaskRef::Id("task123".into()));
    }

    #[test]
    fn name_and_id_together_fail_to_parse() {
        assert!(Cli::try_parse_from(["todo", "detach", "Buy groceries", "--id", "t1"]).is_err());
        assert!(Cli::try_parse_from(["todo", "detach"]).is_err());
    }

    #[test]
    fn detach_index_is_optional() {
        match parse(&["detach", "Buy groceries"]) {
            Command::Detach { att_index, .. } => assert_eq!(att_index, None),
            other => panic!("unexpected {other:?}"),
        }
        match parse(&["detach", "Buy groceries", "--index", "0"]) {
            Command::Detach { att_index, .. } => assert_eq!(att_index, Some(0)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn download_output_defaults_to_current_dir() {
        match parse(&["download", "Buy groceries", "--index", "1"]) {
            Command::Download { att_index, output, .. } => {
                assert_eq!(att_index, Some(1));
                assert_eq!(output, PathBuf::from("."));
            }
            other => panic!("unexpected {other:?}"),
        }
        match parse(&["download", "Buy groceries", "-o", "/tmp/downloads"]) {
            Command::Download { output, .. } => assert_eq!(output, PathBuf::from("/tmp/downloads")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn new_accepts_short_and_long_attach() {
        for flag in ["-A", "--attach"] {
            match parse(&["new", flag, "/tmp/report.pdf", "Review report"]) {
                Command::New { task_name, attach, .. } => {
                    assert_eq!(task_name, "Review report");
                    assert_eq!(attach, Some(PathBuf::from("/tmp/report.pdf")));
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        match parse(&["new", "buy milk"]) {
            Command::New { attach, .. } => assert_eq!(attach, None),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn note_with_name_or_id() {
        match parse(&["note", "Buy groceries", "Remember to check prices", "-l", "Shopping"]) {
            Command::Note { args, scope } => {
                let (task, content) = scope.split_positionals(&args, "note content").unwrap();
                assert_eq!(task, TaskRef::Name("Buy groceries".into()));
                assert_eq!(content, "Remember to check prices");
            }
            other => panic!("unexpected {other:?}"),
        }
        match parse(&["note", "--id", "task123", "This is a note"]) {
            Command::Note { args, scope } => {
                let (task, content) = scope.split_positionals(&args, "note content").unwrap();
                assert_eq!(task, TaskRef::Id("task123".into()));
                assert_eq!(content, "This is a note");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn note_without_content_names_the_missing_value() {
        match parse(&["note", "Buy groceries"]) {
            Command::Note { args, scope } => {
                let err = scope.split_positionals(&args, "note content").unwrap_err();
                assert_eq!(err.to_string(), "missing note content for task 'Buy groceries'");
            }
            other => panic!("unexpected {other:?}"),
        }
        match parse(&["attach", "Buy groceries"]) {
            Command::Attach { args, scope } => {
                let err = scope.split_positionals(&args, "file path").unwrap_err();
                assert_eq!(err.to_string(), "missing file path for task 'Buy groceries'");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn note_aliases_parse() {
        assert!(matches!(parse(&["sn", "Buy groceries"]), Command::ShowNote { .. }));
        assert!(matches!(parse(&["show-note", "--id", "t1", "--json"]), Command::ShowNote { .. }));
        assert!(matches!(parse(&["cn", "Buy groceries"]), Command::ClearNote { .. }));
        let target = target_of(parse(&["clear-note", "Buy groceries", "-l", "Shopping", "--json"]));
        assert_eq!(target.scope.list.as_deref(), Some("Shopping"));
        assert!(target.scope.json);
    }

    #[test]
    fn json_flag_is_reported() {
        assert!(parse(&["attachments", "x", "--json"]).wants_json());
        assert!(!parse(&["attachments", "x"]).wants_json());
        assert!(parse(&["ls", "--json"]).wants_json());
        assert!(!parse(&["login"]).needs_session());
    }
}
