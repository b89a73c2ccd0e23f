mod connect_params_builder;
mod domain;
mod frame;
