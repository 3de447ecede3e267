mod circuit_breaker;
mod rate_limiter;
