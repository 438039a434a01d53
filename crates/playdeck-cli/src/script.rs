//! Session scripts for `simulate`

use anyhow::{anyhow, bail, Result};
use serde_json::{json, Value};
use std::time::Duration;

/// One scripted step
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Invoke a command path with arguments
    Command { path: String, args: Value },
    /// Let time pass
    Wait(Duration),
    /// Make the backing player stall
    Stall,
    /// Run the backing player to its end
    End,
}

impl Step {
    fn command(path: &str, args: Value) -> Self {
        Step::Command {
            path: path.to_string(),
            args,
        }
    }
}

fn number(verb: &str, arg: Option<&str>) -> Result<f64> {
    let raw = arg.ok_or_else(|| anyhow!("'{verb}' needs a number"))?;
    raw.parse()
        .map_err(|_| anyhow!("'{verb}': '{raw}' is not a number"))
}

/// Parse `play;wait 500;seek 30;...`
pub fn parse(script: &str) -> Result<Vec<Step>> {
    script
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_step)
        .collect()
}

fn parse_step(step: &str) -> Result<Step> {
    let mut parts = step.split_whitespace();
    let verb = parts.next().unwrap_or_default();
    let arg = parts.next();

    let parsed = match verb {
        "play" => Step::command("videoPlayer.play", json!({})),
        "pause" => Step::command("videoPlayer.pause", json!({})),
        "toggle" => Step::command("togglePlayback", json!({})),
        "mute" => Step::command("toggleMute", json!({})),
        "fullscreen" => Step::command("toggleFullScreen", json!({})),
        "seek" => Step::command("seek", json!({ "time": number(verb, arg)? })),
        "volume" => Step::command("setVolume", json!({ "volume": number(verb, arg)? })),
        "speed" => {
            let label = arg.ok_or_else(|| anyhow!("'speed' needs a label"))?;
            Step::command("setSpeed", json!({ "speed": label }))
        }
        "wait" => Step::Wait(Duration::from_millis(number(verb, arg)? as u64)),
        "stall" => Step::Stall,
        "end" => Step::End,
        path if path.contains('.') || path.starts_with(char::is_lowercase) => {
            let args = match arg {
                Some(raw) => serde_json::from_str(raw).unwrap_or_else(|_| json!(raw)),
                None => json!({}),
            };
            Step::command(path, args)
        }
        other => bail!("unknown step '{other}'"),
    };

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_script() {
        let steps = parse("play; wait 250 ;seek 30;speed 1.5;;end").unwrap();
        assert_eq!(
            steps,
            vec![
                Step::command("videoPlayer.play", json!({})),
                Step::Wait(Duration::from_millis(250)),
                Step::command("seek", json!({ "time": 30.0 })),
                Step::command("setSpeed", json!({ "speed": "1.5" })),
                Step::End,
            ]
        );
    }

    #[test]
    fn test_raw_command_path() {
        let steps = parse(r#"videoPlayer.seek {"time":12}"#).unwrap();
        assert_eq!(steps, vec![Step::command("videoPlayer.seek", json!({ "time": 12 }))]);
    }

    #[test]
    fn test_bad_steps() {
        assert!(parse("seek soon").is_err());
        assert!(parse("wait").is_err());
        assert!(parse("Rewind").is_err());
    }
}
