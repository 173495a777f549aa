mod actuator;
mod builder;
mod command;
mod events;
mod feed;
mod host;
mod http;
mod mqtt;
mod scheduler;
mod store;
mod thermostat;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
