//! Thin HTTP client behind the `client` subcommand.

use anyhow::{anyhow, bail, Context, Result};
use reqwest::{Response, StatusCode};

use crate::cli::{ClientArgs, Method};

/// Performs one request against a running server and prints the outcome.
///
/// Any failure, including a non-2xx response, is returned as an error so the
/// process exits non-zero.
pub async fn run(args: ClientArgs) -> Result<()> {
    let output = execute(&args).await?;
    println!("{output}");
    Ok(())
}

async fn execute(args: &ClientArgs) -> Result<String> {
    if args.key.is_empty() {
        bail!("using any method without a key is not valid");
    }

    let client = reqwest::Client::new();
    let url = format!("{}/db", args.host);

    match args.method {
        Method::Get => {
            reject_value(args, "get")?;
            let response = send(client.get(&url).query(&[("key", &args.key)]), args).await?;
            response
                .text()
                .await
                .context("failed to read response body")
        }
        Method::Put => {
            let value = args
                .value
                .clone()
                .ok_or_else(|| anyhow!("using 'put' method without value is not possible"))?;
            let response = send(
                client.put(&url).query(&[("key", &args.key)]).body(value),
                args,
            )
            .await?;
            Ok(match response.status() {
                StatusCode::CREATED => "created".to_owned(),
                _ => "updated".to_owned(),
            })
        }
        Method::Delete => {
            reject_value(args, "delete")?;
            send(client.delete(&url).query(&[("key", &args.key)]), args).await?;
            Ok("deleted".to_owned())
        }
    }
}

fn reject_value(args: &ClientArgs, method: &str) -> Result<()> {
    if args.value.is_some() {
        bail!("using '{method}' method with value is not possible");
    }
    Ok(())
}

/// Sends the request and turns any non-2xx status into an error.
async fn send(request: reqwest::RequestBuilder, args: &ClientArgs) -> Result<Response> {
    let response = request
        .send()
        .await
        .with_context(|| format!("request to {} failed", args.host))?;
    let status = response.status();
    if !status.is_success() {
        bail!("the request returned with http code: {}", status.as_u16());
    }
    Ok(response)
}
