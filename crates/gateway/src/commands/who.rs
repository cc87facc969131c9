//! `/who` — lists the display names currently connected, demonstrating a
//! zero-parameter slash command registered directly on [`CmdRouter`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use qws_session::{CmdRouter, Command, UserConn, UserList};
use qws_sync::CancelToken;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub fn register(cmd_router: &mut CmdRouter, users: Arc<UserList>) {
    cmd_router.global.push(Command {
        base: "/who".to_string(),
        params: String::new(),
        help: "list connected users".to_string(),
        handler: Arc::new(move |_token: &CancelToken, _conn: &UserConn, _params: &[String]| -> BoxFuture<'_, String> {
            let users = users.clone();
            Box::pin(async move {
                let names: Vec<String> = users.members().iter().map(UserConn::print_name).collect();
                if names.is_empty() {
                    "nobody else is here".to_string()
                } else {
                    names.join(", ")
                }
            })
        }),
    });
}
