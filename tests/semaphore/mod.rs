mod cancellation;
mod concurrency;
