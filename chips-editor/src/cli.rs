//! Command-line interface.
//!
//! Each invocation runs one command against a fresh editor and prints the
//! result as JSON.

use std::path::PathBuf;

use chips_core::{BoxId, CardId, ChipsResult, CreateCardOptions, OpenCardOptions, SaveCardOptions};
use chips_sdk::{BackendMode, DEFAULT_CLIENT_NAME};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use crate::config::{EditorConfig, RetryConfig};
use crate::editor::ChipsEditor;

/// Command-line arguments for chips-editor.
#[derive(Debug, Clone, Parser)]
#[command(name = "chips-editor")]
#[command(about = "Create, open and save Chips cards from the command line")]
#[command(version)]
pub struct CliArgs {
    /// Backend to use (`mock` or `live`)
    #[arg(long, env = "CHIPS_BACKEND", default_value = "mock")]
    pub backend: BackendMode,

    /// Card service URL for the live backend (e.g., <http://localhost:7000/rpc>)
    #[arg(long, env = "CHIPS_ENDPOINT")]
    pub endpoint: Option<String>,

    /// JSON seed file for the mock backend
    #[arg(long, env = "CHIPS_SEED")]
    pub seed: Option<PathBuf>,

    /// Total attempts for transient backend failures
    #[arg(long, env = "CHIPS_RETRY_ATTEMPTS", default_value_t = 3)]
    pub retry_attempts: u32,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// One editor operation.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create a card
    Create {
        /// Card type
        #[arg(long = "type", default_value = "note")]
        card_type: String,
        /// Card title
        #[arg(long)]
        title: Option<String>,
        /// Box to file the card in
        #[arg(long = "box")]
        box_id: Option<String>,
        /// Extra field, as `key=value` (value parsed as JSON, else a string)
        #[arg(long = "set", value_parser = parse_key_value)]
        set: Vec<(String, Value)>,
    },
    /// Open a card by id
    Open {
        /// Card id
        id: String,
    },
    /// Save a partial update to a card
    Save {
        /// Card id
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// Extra field to set, as `key=value`
        #[arg(long = "set", value_parser = parse_key_value)]
        set: Vec<(String, Value)>,
        /// Extra field to remove
        #[arg(long = "unset")]
        unset: Vec<String>,
    },
    /// Delete a card
    Delete {
        /// Card id
        id: String,
    },
    /// List boxes, or show one box
    Boxes {
        /// Box id
        id: Option<String>,
    },
    /// List cards
    Cards,
}

impl From<CliArgs> for EditorConfig {
    fn from(args: CliArgs) -> Self {
        Self {
            backend: args.backend,
            endpoint: args.endpoint,
            seed_path: args.seed,
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            retry: RetryConfig {
                max_attempts: args.retry_attempts,
                ..RetryConfig::default()
            },
        }
    }
}

/// Parse `key=value`; the value is JSON if it parses, otherwise a string.
fn parse_key_value(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in `{raw}`"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Run one command and return its JSON result.
///
/// # Errors
///
/// Propagates any editor error.
pub async fn run_command(editor: &ChipsEditor, command: Command) -> ChipsResult<Value> {
    match command {
        Command::Create {
            card_type,
            title,
            box_id,
            set,
        } => {
            let mut options = CreateCardOptions::new(card_type).activate();
            if let Some(title) = title {
                options = options.with_title(title);
            }
            if let Some(box_id) = box_id {
                options = options.in_box(box_id);
            }
            let options = set
                .into_iter()
                .fold(options, |opts, (k, v)| opts.with_extra(k, v));
            Ok(serde_json::to_value(editor.create_card(options).await?)?)
        }
        Command::Open { id } => {
            let card = editor.open_card(OpenCardOptions::new(id)).await?;
            Ok(serde_json::to_value(card)?)
        }
        Command::Save {
            id,
            title,
            set,
            unset,
        } => {
            let mut patch = SaveCardOptions::new(id);
            if let Some(title) = title {
                patch = patch.with_title(title);
            }
            let patch = set
                .into_iter()
                .fold(patch, |p, (k, v)| p.with_extra(k, v));
            let patch = unset.into_iter().fold(patch, SaveCardOptions::without_extra);
            Ok(serde_json::to_value(editor.save_card(patch).await?)?)
        }
        Command::Delete { id } => {
            let id = CardId::new(id);
            editor.delete_card(&id).await?;
            Ok(json!({ "deleted": id }))
        }
        Command::Boxes { id: Some(id) } => {
            Ok(serde_json::to_value(editor.get_box(&BoxId::new(id)).await?)?)
        }
        Command::Boxes { id: None } => Ok(serde_json::to_value(editor.list_boxes().await?)?),
        Command::Cards => Ok(serde_json::to_value(editor.list_cards().await?)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chips_sdk::{MockBox, MockCard, MockSeed, SdkConnector, SdkConnectorOptions};

    fn editor() -> ChipsEditor {
        let seed = MockSeed::new()
            .with_box(MockBox::new("B1", "Inbox"))
            .with_card(MockCard::new("c1", "note").with_title("Hello").in_box("B1"));
        let connector = SdkConnector::new(SdkConnectorOptions::mock(seed)).unwrap();
        ChipsEditor::new(connector, RetryConfig::none())
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(parse_key_value("n=3").unwrap(), ("n".into(), json!(3)));
        assert_eq!(
            parse_key_value("color=red").unwrap(),
            ("color".into(), json!("red"))
        );
        assert_eq!(
            parse_key_value("tags=[\"a\"]").unwrap(),
            ("tags".into(), json!(["a"]))
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=1").is_err());
    }

    #[test]
    fn test_cli_args_into_config() {
        let args = CliArgs::parse_from([
            "chips-editor",
            "--backend",
            "live",
            "--endpoint",
            "http://localhost:7000",
            "--retry-attempts",
            "5",
            "cards",
        ]);
        let config = EditorConfig::from(args);
        assert_eq!(config.backend, BackendMode::Live);
        assert_eq!(config.endpoint.as_deref(), Some("http://localhost:7000"));
        assert_eq!(config.retry.max_attempts, 5);
    }

    #[test]
    fn test_save_subcommand_parses() {
        let args = CliArgs::parse_from([
            "chips-editor",
            "save",
            "c1",
            "--title",
            "New",
            "--set",
            "n=1",
            "--unset",
            "old",
        ]);
        match args.command {
            Command::Save {
                id,
                title,
                set,
                unset,
            } => {
                assert_eq!(id, "c1");
                assert_eq!(title.as_deref(), Some("New"));
                assert_eq!(set, vec![("n".to_string(), json!(1))]);
                assert_eq!(unset, vec!["old".to_string()]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_open_and_save() {
        let editor = editor();
        let opened = run_command(&editor, Command::Open { id: "c1".into() })
            .await
            .unwrap();
        assert_eq!(opened["base"]["title"], "Hello");

        let saved = run_command(
            &editor,
            Command::Save {
                id: "c1".into(),
                title: None,
                set: vec![("color".into(), json!("red"))],
                unset: vec![],
            },
        )
        .await
        .unwrap();
        assert_eq!(saved["metadata"]["extra"]["color"], "red");
        assert_eq!(saved["base"]["title"], "Hello");
    }

    #[tokio::test]
    async fn test_run_boxes_and_missing_card() {
        let editor = editor();
        let boxes = run_command(&editor, Command::Boxes { id: None }).await.unwrap();
        assert_eq!(boxes.as_array().map(Vec::len), Some(1));

        let err = run_command(&editor, Command::Open { id: "ghost".into() })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), chips_core::ErrorKind::NotFound);
    }
}
