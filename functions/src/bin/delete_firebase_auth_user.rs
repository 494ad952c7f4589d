use std::sync::Arc;
use tracing::error;
use userfn_functions::{
    account::DeleteAccount,
    config::IdentityConfig,
    identity::IdentityToolkit,
    telemetry,
};
use userfn_http::{
    handler,
    runtime::{self, Error},
};

#[tokio::main]
async fn main() -> Result<(), Error> {
    telemetry::init();

    let platform = match IdentityConfig::from_env().and_then(IdentityToolkit::new) {
        Ok(platform) => platform,
        Err(err) => {
            error!(error = %err, "failed to configure the identity platform");
            runtime::report_init_error(&err).await?;
            return Err(err.into());
        }
    };

    runtime::run(handler(DeleteAccount::new(Arc::new(platform)))).await
}
