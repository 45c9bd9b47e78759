// Copyright 2025 QFind Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use qfind::{Config, FileId, Index, QueryCtx};

#[derive(Parser, Debug)]
#[command(name = "qfind", about = "Quickly search for files by name.")]
struct Args {
    /// Use DBPATH as database (reserved for a future serializer)
    #[arg(short = 'd', long = "database", value_name = "DBPATH")]
    database: Option<PathBuf>,

    /// Ignore case distinctions
    #[arg(short = 'i', long = "ignore-case")]
    ignore_case: bool,

    /// PATTERN is a regular expression
    #[arg(short = 'r', long = "regexp")]
    regex: bool,

    /// Update the database
    #[arg(short = 'u', long = "update")]
    update: bool,

    /// Display version information
    #[arg(short = 'v', long = "version")]
    version: bool,

    /// Search patterns
    #[arg(value_name = "PATTERN")]
    patterns: Vec<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) if err.kind() == ErrorKind::DisplayHelp => {
            print!("{}", err);
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            eprint!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    match run(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("qfind: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<ExitCode> {
    if args.version {
        println!("qfind {}", env!("CARGO_PKG_VERSION"));
        return Ok(ExitCode::SUCCESS);
    }

    // The index is memory-resident; -d names a database that a future
    // serializer will read and write.
    let _ = &args.database;

    let index = Index::new(Config::default());

    if args.update {
        println!("Updating database...");
        index.build(Path::new("/"))?;
        println!("Database updated.");
        return Ok(ExitCode::SUCCESS);
    }

    if args.patterns.is_empty() {
        eprintln!("No search pattern provided");
        return Ok(ExitCode::FAILURE);
    }

    let root = std::env::current_dir()?;
    index.build(&root)?;

    let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
    let mut seen: HashSet<FileId> = HashSet::new();
    let mut ids: Vec<FileId> = Vec::new();
    for pattern in &args.patterns {
        let query = QueryCtx {
            query: pattern.clone(),
            case_sensitive: !args.ignore_case,
            regex_enabled: args.regex,
            uid,
            gid,
            max_results: qfind::config::MAX_RESULTS,
        };
        for id in index.search(&query)? {
            if seen.insert(id) {
                ids.push(id);
            }
        }
    }

    let paths = index.resolve_paths(&ids);
    if paths.is_empty() {
        println!("No matching files found.");
    } else {
        for path in paths {
            println!("{}", path.display());
        }
    }
    Ok(ExitCode::SUCCESS)
}
