//! Line-oriented input: slash commands map onto intents, anything else is a
//! chat query.

use std::path::PathBuf;

use client_core::UiIntent;
use thiserror::Error;

pub const HELP: &str = "\
Commands:
  /models              refresh the model list
  /select <model>      select a model from the list
  /load                load the selected model
  /stats               refresh backend stats
  /files <path>...     choose files to upload
  /upload              upload the chosen files
  /clear               delete every uploaded document
  /rag on|off          toggle retrieval for queries
  /tokens <n>          set max tokens (64-4096)
  /temp <x>            set temperature (0.0-2.0)
  /prompt              open the system prompt editor
  /edit <text>         replace the editor buffer
  /template <id>       load a preset: default, fashion, support, teacher
  /save                save the system prompt
  /close               close the editor without saving
  /help                show this help
  /quit                exit
Any other line is sent as a question.";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Intent(UiIntent),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command /{0}, try /help")]
    Unknown(String),
    #[error("/{command} needs {expected}")]
    MissingArgument {
        command: &'static str,
        expected: &'static str,
    },
    #[error("/{command}: cannot use '{value}', expected {expected}")]
    InvalidArgument {
        command: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(Command::Intent(UiIntent::SendQuery {
            text: line.to_string(),
        })));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    let intent = match name {
        "help" => return Ok(Some(Command::Help)),
        "quit" | "exit" => return Ok(Some(Command::Quit)),
        "models" => UiIntent::RefreshModels,
        "select" => UiIntent::SelectModel {
            model_id: required(arg, "select", "a model id")?.to_string(),
        },
        "load" => UiIntent::LoadSelectedModel,
        "stats" => UiIntent::RefreshStats,
        "files" => {
            let paths: Vec<PathBuf> = arg.split_whitespace().map(PathBuf::from).collect();
            if paths.is_empty() {
                return Err(CommandError::MissingArgument {
                    command: "files",
                    expected: "one or more paths",
                });
            }
            UiIntent::SelectFiles { paths }
        }
        "upload" => UiIntent::UploadDocuments,
        "clear" => UiIntent::ClearDocuments,
        "rag" => match required(arg, "rag", "on or off")? {
            "on" => UiIntent::SetUseRag(true),
            "off" => UiIntent::SetUseRag(false),
            other => {
                return Err(CommandError::InvalidArgument {
                    command: "rag",
                    value: other.to_string(),
                    expected: "on or off",
                })
            }
        },
        "tokens" => {
            let value = required(arg, "tokens", "a number")?;
            let max_tokens = value.parse().map_err(|_| CommandError::InvalidArgument {
                command: "tokens",
                value: value.to_string(),
                expected: "a whole number",
            })?;
            UiIntent::SetMaxTokens(max_tokens)
        }
        "temp" => {
            let value = required(arg, "temp", "a number")?;
            let temperature = value
                .parse::<f32>()
                .ok()
                .filter(|t| t.is_finite())
                .ok_or_else(|| CommandError::InvalidArgument {
                    command: "temp",
                    value: value.to_string(),
                    expected: "a decimal number",
                })?;
            UiIntent::SetTemperature(temperature)
        }
        "prompt" => UiIntent::OpenPromptEditor,
        // `\n` in the argument becomes a line break so multi-line prompts fit on one input line.
        "edit" => UiIntent::EditPrompt {
            text: arg.replace("\\n", "\n"),
        },
        "template" => UiIntent::SelectTemplate {
            template_id: required(arg, "template", "a template id")?.to_string(),
        },
        "save" => UiIntent::SavePrompt,
        "close" => UiIntent::ClosePromptEditor,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(Command::Intent(intent)))
}

fn required<'a>(
    arg: &'a str,
    command: &'static str,
    expected: &'static str,
) -> Result<&'a str, CommandError> {
    if arg.is_empty() {
        Err(CommandError::MissingArgument { command, expected })
    } else {
        Ok(arg)
    }
}
