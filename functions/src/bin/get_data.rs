use userfn_functions::{echo, telemetry};
use userfn_http::{
    handler,
    runtime::{self, Error},
};

#[tokio::main]
async fn main() -> Result<(), Error> {
    telemetry::init();
    runtime::run(handler(echo::get_data)).await
}
