/// GET / — liveness probe, independent of the store.
pub async fn health() -> &'static str {
    "Hello World!"
}
