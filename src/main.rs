#[tokio::main]
async fn main() -> anyhow::Result<()> {
    todo_web_lib::run().await
}
