//! Chips editor command-line host.

use anyhow::Context;
use chips_editor::{init_tracing, run_command, ChipsEditor, CliArgs, EditorConfig};
use clap::Parser;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = CliArgs::parse();
    let command = args.command.clone();
    let config = EditorConfig::from(args);
    tracing::debug!(backend = %config.backend, "Starting chips-editor");

    let editor = ChipsEditor::from_config(&config).context("Failed to start editor")?;
    let result = run_command(&editor, command).await;
    editor.dispose();

    let output = result.context("Command failed")?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
