use clap::Subcommand;

use super::{open_engine, CmdResult, SessionArgs};

#[derive(Subcommand)]
pub enum TokenAction {
    /// Register a push token for the session
    Register {
        #[command(flatten)]
        session: SessionArgs,
        /// Opaque push token
        token: String,
    },
}

pub async fn run(action: TokenAction) -> CmdResult {
    match action {
        TokenAction::Register { session, token } => {
            let engine = open_engine(None)?;
            engine
                .register_push_token(&session.session(), &token)
                .await?;
            println!("ok");
        }
    }
    Ok(())
}
