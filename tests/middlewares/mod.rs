mod fanout;
mod rate_limit;
mod validation;
