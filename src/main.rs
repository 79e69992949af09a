//! kindred: local API server for the social connections client.

#[tokio::main]
async fn main() {
    kindred::web_client::run().await;
}
