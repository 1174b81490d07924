//! `loseme-ctl` — management CLI for the `loseme` ingestion daemon.
//!
//! Unlike the teacher's `araliya-ctl`, which talks to a Unix domain socket,
//! this daemon's only transport is HTTP, so `loseme-ctl` is a thin
//! `reqwest::blocking` client over the same route table the server exposes.
//!
//! # Usage
//!
//! ```text
//! loseme-ctl [--url <base>] <command> [args...]
//!
//! Commands:
//!   run create <kind> <scope.json>   create a run over a scope
//!   run start <run_id>               start indexing for a run
//!   run stop <run_id>                request a run stop
//!   run list                         list all runs
//!   sources add <kind> <locator> <scope.json>
//!   sources list                     list monitored sources
//!   sources scan <id>                trigger an immediate scan
//!   search <query> [top_k]           semantic search
//!
//! Flags:
//!   --url <base>   override API base URL (default: $LOSEME_API_URL or http://localhost:8000)
//!   --help, -h     print this help
//! ```

use std::process;

use serde_json::{json, Value};

struct Args {
    url: Option<String>,
    command: Option<String>,
    rest: Vec<String>,
}

fn parse_args() -> Args {
    let mut url = None;
    let mut command = None;
    let mut rest = Vec::new();
    let mut iter = std::env::args().skip(1).peekable();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--url" | "-u" => url = iter.next(),
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            _ if command.is_none() => command = Some(arg),
            _ => rest.push(arg),
        }
    }

    Args { url, command, rest }
}

fn print_help() {
    eprintln!("usage: loseme-ctl [--url <base>] <command> [args...]");
    eprintln!();
    eprintln!("commands:");
    eprintln!("  run create <kind> <scope.json>   create a run over a scope");
    eprintln!("  run start <run_id>               start indexing for a run");
    eprintln!("  run stop <run_id>                 request a run stop");
    eprintln!("  run list                          list all runs");
    eprintln!("  sources add <kind> <locator> <scope.json>");
    eprintln!("  sources list                      list monitored sources");
    eprintln!("  sources scan <id>                 trigger an immediate scan");
    eprintln!("  search <query> [top_k]            semantic search");
    eprintln!();
    eprintln!("flags:");
    eprintln!("  --url, -u <base>   override API base URL");
    eprintln!("  --help, -h         print this help");
}

fn resolve_base_url(override_url: Option<String>) -> String {
    override_url
        .or_else(|| std::env::var("LOSEME_API_URL").ok())
        .unwrap_or_else(|| "http://localhost:8000".to_string())
}

fn main() {
    let args = parse_args();

    let cmd = match args.command {
        Some(c) => c,
        None => {
            eprintln!("error: no command given");
            eprintln!("  run 'loseme-ctl --help' for usage");
            process::exit(1);
        }
    };

    let base_url = resolve_base_url(args.url);
    let client = reqwest::blocking::Client::new();

    if let Err(e) = dispatch(&client, &base_url, &cmd, &args.rest) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn dispatch(client: &reqwest::blocking::Client, base_url: &str, cmd: &str, rest: &[String]) -> Result<(), String> {
    match (cmd, rest) {
        ("run", [sub, tail @ ..]) => run_command(client, base_url, sub, tail),
        ("sources", [sub, tail @ ..]) => sources_command(client, base_url, sub, tail),
        ("search", [query, tail @ ..]) => {
            let top_k = tail.first().and_then(|s| s.parse::<usize>().ok());
            let mut body = json!({ "query": query });
            if let Some(k) = top_k {
                body["top_k"] = json!(k);
            }
            post(client, base_url, "/search", &body)
        }
        _ => Err(format!("unknown command: {cmd}\n  run 'loseme-ctl --help' for usage")),
    }
}

fn run_command(client: &reqwest::blocking::Client, base_url: &str, sub: &str, rest: &[String]) -> Result<(), String> {
    match (sub, rest) {
        ("create", [kind, scope_json]) => {
            let scope: Value = serde_json::from_str(scope_json).map_err(|e| format!("invalid scope json: {e}"))?;
            let mut scope = scope;
            scope["kind"] = json!(kind);
            post(client, base_url, "/runs/create", &json!({ "scope": scope }))
        }
        ("start", [run_id]) => post(client, base_url, &format!("/runs/start_indexing/{run_id}"), &json!({})),
        ("stop", [run_id]) => post(client, base_url, &format!("/runs/request_stop/{run_id}"), &json!({})),
        ("list", []) => get(client, base_url, "/runs/list"),
        _ => Err("usage: loseme-ctl run <create|start|stop|list> [args...]".to_string()),
    }
}

fn sources_command(client: &reqwest::blocking::Client, base_url: &str, sub: &str, rest: &[String]) -> Result<(), String> {
    match (sub, rest) {
        ("add", [kind, locator, scope_json]) => {
            let mut scope: Value = serde_json::from_str(scope_json).map_err(|e| format!("invalid scope json: {e}"))?;
            scope["kind"] = json!(kind);
            post(
                client,
                base_url,
                "/sources/add",
                &json!({ "kind": kind, "locator": locator, "scope": scope }),
            )
        }
        ("list", []) => get(client, base_url, "/sources/get_all_sources"),
        ("scan", [id]) => post(client, base_url, &format!("/sources/scan/{id}"), &json!({})),
        _ => Err("usage: loseme-ctl sources <add|list|scan> [args...]".to_string()),
    }
}

fn get(client: &reqwest::blocking::Client, base_url: &str, path: &str) -> Result<(), String> {
    let resp = client
        .get(format!("{base_url}{path}"))
        .send()
        .map_err(|e| format!("request failed: {e}"))?;
    print_response(resp)
}

fn post(client: &reqwest::blocking::Client, base_url: &str, path: &str, body: &Value) -> Result<(), String> {
    let resp = client
        .post(format!("{base_url}{path}"))
        .json(body)
        .send()
        .map_err(|e| format!("request failed: {e}"))?;
    print_response(resp)
}

fn print_response(resp: reqwest::blocking::Response) -> Result<(), String> {
    let status = resp.status();
    let body: Value = resp.json().map_err(|e| format!("invalid response body: {e}"))?;
    let pretty = serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string());

    if status.is_success() {
        println!("{pretty}");
        Ok(())
    } else {
        Err(format!("server returned {status}\n{pretty}"))
    }
}
