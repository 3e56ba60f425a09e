//! Subcommand implementations.

pub mod change_password;
pub mod login;
pub mod logout;
pub mod register;
pub mod validate;
pub mod watch;
pub mod whoami;

use fleetsync_core::Session;

use crate::output;

/// Print the identity a session belongs to.
pub(crate) fn print_identity(session: &Session) {
    match &session.user {
        Some(user) => {
            output::field("User", &user.username);
            if let Some(role) = &user.role {
                output::field("Role", role);
            }
            if let Some(uuid) = &user.uuid {
                output::field("UUID", uuid);
            }
        }
        None => output::field("User", "(profile unavailable)"),
    }
}
