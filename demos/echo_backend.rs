//! Three local backends for trying the balancer by hand.
//!
//! Each answers every request with the port it listens on, so the round
//! robin is visible from the client side.

use std::net::SocketAddr;

use axum::{extract::Request, Router};

const PORTS: [u16; 3] = [3001, 3002, 3003];

async fn serve(port: u16) -> std::io::Result<()> {
    let app = Router::new().fallback(move |request: Request| async move {
        println!("Backend {} handled {} {}", port, request.method(), request.uri());
        format!("Hello from Backend Server running on Port {}\n", port)
    });

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("Backend Server started at http://localhost:{}", port);
    axum::serve(listener, app).await
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let servers: Vec<_> = PORTS.into_iter().map(|port| tokio::spawn(serve(port))).collect();
    for server in servers {
        if let Ok(Err(e)) = server.await {
            eprintln!("Backend failed: {}", e);
        }
    }
    Ok(())
}
