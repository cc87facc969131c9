//! Slash-command parsing: chat text beginning with `/` is matched by prefix
//! against three ordered command lists and dispatched with its parameter
//! tail split according to the matched command's template.
//!
//! Grounded directly on the original `cmdrouter.go`, with one fix: that
//! file's parameter splitter sets the last field's starting index to the
//! position of the delimiting space rather than the position after it,
//! producing a leading space in the final parameter. This implementation
//! uses the corrected `last = i + 1`.

use std::sync::Arc;

use serde::Serialize;
use tracing::Instrument;

use qws_sync::CancelToken;

use crate::command_log::CommandLog;
use crate::handlers::BoxFuture;
use crate::user_conn::UserConn;

pub type CmdHandler = Arc<
    dyn for<'a> Fn(&'a CancelToken, &'a UserConn, &'a [String]) -> BoxFuture<'a, String>
        + Send
        + Sync,
>;

/// One registered slash command.
#[derive(Clone)]
pub struct Command {
    /// Must start with `/`.
    pub base: String,
    /// Space-separated parameter name template, e.g. `"target reason"`.
    pub params: String,
    pub help: String,
    pub handler: CmdHandler,
}

impl Command {
    /// Number of parameters this command expects, derived from `params`.
    fn want_params(&self) -> usize {
        if self.params.is_empty() {
            0
        } else {
            self.params.split(' ').count()
        }
    }
}

#[derive(Serialize)]
struct CommandInfo<'a> {
    base: &'a str,
    params: &'a str,
    help: &'a str,
}

impl<'a> From<&'a Command> for CommandInfo<'a> {
    fn from(c: &'a Command) -> Self {
        Self {
            base: &c.base,
            params: &c.params,
            help: &c.help,
        }
    }
}

/// The three command scopes, scanned in this order for a prefix match:
/// commands available everywhere, commands scoped to the current lobby, and
/// lobby-admin-only commands.
#[derive(Default, Serialize)]
pub struct CmdRouter {
    #[serde(serialize_with = "serialize_commands")]
    pub global: Vec<Command>,
    #[serde(serialize_with = "serialize_commands")]
    pub lobby: Vec<Command>,
    #[serde(serialize_with = "serialize_commands")]
    pub lobby_admin: Vec<Command>,
}

fn serialize_commands<S: serde::Serializer>(
    commands: &[Command],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(commands.iter().map(CommandInfo::from))
}

impl CmdRouter {
    pub fn new() -> Self {
        Self::default()
    }

    fn find_handler(&self, cmd: &str) -> Option<&Command> {
        [&self.global, &self.lobby, &self.lobby_admin]
            .into_iter()
            .flatten()
            .find(|c| c.base.len() >= cmd.len() && c.base.as_bytes()[..cmd.len()] == *cmd.as_bytes())
    }

    /// Parse and dispatch one slash-command line. `text` is the already
    /// JSON-decoded chat string (no surrounding quotes — those only existed
    /// in the wire encoding, which serde has already stripped).
    pub async fn serve(
        &self,
        token: &CancelToken,
        conn: &UserConn,
        text: &str,
        log: &mut dyn CommandLog,
    ) {
        if text == "/" {
            conn.send_catalogue(self);
            return;
        }

        let (cmd, rest) = match text.find(' ') {
            Some(i) => (&text[..i], &text[i + 1..]),
            None => (text, ""),
        };

        let Some(matched) = self.find_handler(cmd) else {
            conn.send_catalogue(self);
            return;
        };

        let params = split_params(rest, matched.want_params());
        let handler = matched.handler.clone();

        let result = handler(token, conn, &params).instrument(tracing::debug_span!("cmd", cmd)).await;
        log.status(&result);
        if !result.is_empty() {
            conn.send_info(qws_wire::codes::info_kind::PLAIN, result);
        }
    }
}

/// Split `rest` into exactly `want` fields, splitting on the first
/// `want - 1` spaces; the remainder (after the last such space) becomes the
/// final field verbatim. Missing trailing fields are padded with `""`.
fn split_params(rest: &str, want: usize) -> Vec<String> {
    if want == 0 {
        return Vec::new();
    }

    let bytes = rest.as_bytes();
    let mut params = Vec::with_capacity(want);
    let mut start = 0usize;
    let mut spaces_consumed = 0usize;

    for (i, &b) in bytes.iter().enumerate() {
        if spaces_consumed + 1 >= want {
            break;
        }
        if b == b' ' {
            params.push(rest[start..i].to_string());
            start = i + 1;
            spaces_consumed += 1;
        }
    }
    params.push(rest[start..].to_string());

    while params.len() < want {
        params.push(String::new());
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_params_pads_missing_fields() {
        assert_eq!(split_params("", 2), vec!["".to_string(), "".to_string()]);
    }

    #[test]
    fn split_params_keeps_remainder_in_last_field() {
        // want=2: one delimiting space, remainder (with any further spaces) is field 2.
        let got = split_params("alice hello there", 2);
        assert_eq!(got, vec!["alice".to_string(), "hello there".to_string()]);
    }

    #[test]
    fn split_params_does_not_leave_leading_space() {
        // Regression test for the historical off-by-one: the second field
        // must not start with the space that delimited it.
        let got = split_params("a b", 2);
        assert_eq!(got[1], "b");
    }

    #[test]
    fn find_handler_picks_first_matching_prefix() {
        let mut router = CmdRouter::new();
        fn noop_cmd_handler() -> CmdHandler {
            Arc::new(
                |_t: &CancelToken, _c: &UserConn, _p: &[String]| -> BoxFuture<'_, String> {
                    Box::pin(async { String::new() })
                },
            )
        }

        router.global.push(Command {
            base: "/help".to_string(),
            params: String::new(),
            help: "help".to_string(),
            handler: noop_cmd_handler(),
        });
        router.global.push(Command {
            base: "/helpme".to_string(),
            params: String::new(),
            help: "helpme".to_string(),
            handler: noop_cmd_handler(),
        });
        assert_eq!(router.find_handler("/help").unwrap().base, "/help");
        assert_eq!(router.find_handler("/helpm").unwrap().base, "/helpme");
    }
}
