use userfn_functions::{echo, telemetry};
use userfn_http::{
    handler,
    runtime::{self, Error},
};

#[tokio::main]
async fn main() -> Result<(), Error> {
    telemetry::init();
    runtime::run(handler(echo::post_data)).await
}
