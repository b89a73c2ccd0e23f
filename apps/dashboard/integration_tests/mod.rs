// Integration tests for the dashboard binary's library surface

mod startup;
