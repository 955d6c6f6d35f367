mod live_test;
mod polling_test;
