mod backoff;
mod error;
mod live;
mod pending;
mod registry;
mod resource;
mod tier;
