mod config;
mod gateway_client;
mod helpers;
mod sync;
mod tool_client;
