use serde_json::Value;
use tankd_rpc::RpcClient;

use crate::cmd::RequestArgs;
use crate::exit::{client_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};

/// Fire one request at a service and print the raw response envelope —
/// handy for poking a live deployment.
pub fn run(args: RequestArgs) -> CliResult<i32> {
    let body: Value = serde_json::from_str(&args.json)
        .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;

    let client = RpcClient::new(args.target);
    let response = client
        .request(&body)
        .map_err(|err| client_error("request failed", err))?;

    let rendered = serde_json::to_string_pretty(&response)
        .map_err(|err| CliError::new(INTERNAL, format!("response render failed: {err}")))?;
    println!("{rendered}");

    Ok(SUCCESS)
}
