#![allow(dead_code)]
#![allow(incomplete_features)]

mod base;
mod cmd;
mod config;
mod database;
mod error;
mod log;
mod position;
mod restore;
mod runtime;
mod shadow;
mod sqlite;
mod storage;
mod sync;

use clap::Parser;
use config::Arg;

use crate::base::GlobalInstance;
use crate::cmd::command;
use crate::runtime::GlobalIORuntime;

fn main() -> anyhow::Result<()> {
    GlobalInstance::init();
    GlobalIORuntime::init(num_cpus::get())?;

    let arg = Arg::parse();
    let runtime = GlobalIORuntime::instance();

    runtime.block_on(async move {
        let mut cmd = command(arg)?;
        cmd.run().await
    })?;

    Ok(())
}
