use clap::Parser;
use courier::*;
use courier_demo::{EchoServiceStub, GreetServiceStub, Request, demo_router};
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Base URL of the remote services, e.g. `http://127.0.0.1:8000/demo`.
    #[arg(default_value = "http://127.0.0.1:8000/demo")]
    pub url: String,

    /// Call the demo services in-process instead of over HTTP.
    #[arg(long, default_value_t = false)]
    pub local: bool,

    /// Wire codec.
    #[arg(long, default_value = "message-pack")]
    pub codec: Codec,

    /// HTTP fetch backend; detected when omitted.
    #[arg(long)]
    pub backend: Option<HttpBackendKind>,

    /// Request value.
    #[arg(short, long, default_value = "alice")]
    pub value: String,

    /// Fetch the remote method schemas, print them and exit.
    #[arg(long, default_value_t = false)]
    pub describe: bool,

    /// Enable stress testing.
    #[arg(long, default_value_t = false)]
    pub stress: bool,

    /// Stress testing duration.
    #[arg(long, default_value = "60")]
    pub secs: u64,

    /// The number of coroutines.
    #[arg(long, default_value = "32")]
    pub coroutines: usize,
}

impl Args {
    fn transport(&self) -> Result<AnyTransport> {
        if self.local {
            return Ok(LocalTransport::with_protocol(demo_router(), self.codec).into());
        }
        let config = HttpTransportConfig {
            backend: self.backend,
            ..Default::default()
        };
        Ok(HttpTransport::with_config(self.url.clone(), self.codec, &config)?.into())
    }
}

#[derive(Default)]
struct State {
    total: AtomicUsize,
    fails: AtomicUsize,
}

async fn stress_test(args: Args, transport: AnyTransport) {
    let state = Arc::new(State::default());
    let start_time = std::time::Instant::now();
    let stub = Arc::new(EchoServiceStub::new(transport));
    let secs = args.secs;
    let mut tasks = vec![];
    for _ in 0..args.coroutines {
        let value = Request(args.value.clone());
        let state = state.clone();
        let stub = stub.clone();
        tasks.push(tokio::spawn(async move {
            while start_time.elapsed().as_secs() < secs {
                for _ in 0..256 {
                    let result = stub.echo(value.clone()).await;
                    state.total.fetch_add(1, Ordering::AcqRel);
                    if result.is_err() {
                        state.fails.fetch_add(1, Ordering::AcqRel);
                    }
                }
            }
        }));
    }
    tokio::select! {
        _ = async {
            for task in tasks {
                if let Err(e) = task.await {
                    tracing::error!("stress task failed: {e}");
                }
            }
        } => {
        }
        _ = async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                interval.tick().await;
                let total = state.total.swap(0, Ordering::AcqRel);
                let fails = state.fails.swap(0, Ordering::AcqRel);
                tracing::info!("QPS: {total}/s, fails: {fails}/s");
            }
        } => {
        }
    }
}

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();

    let transport = args.transport()?;
    if args.describe {
        let mut infos = EchoServiceStub::new(&transport).describe().await?;
        infos.extend(GreetServiceStub::new(&transport).describe().await?);
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(());
    }

    tracing::info!(
        "calling {} with {} codec",
        if args.local { "local services" } else { args.url.as_str() },
        transport.protocol()
    );

    if args.stress {
        stress_test(args, transport).await;
    } else {
        let echo = EchoServiceStub::new(&transport);
        let rsp = echo.echo(Request(args.value.clone())).await;
        tracing::info!("echo rsp: {:?}", rsp);

        let greet = GreetServiceStub::new(&transport);
        let rpc = greet.greet_rpc(Request(args.value.clone())).await;
        tracing::info!("greet state: {}", rpc.state());
        let rsp = rpc.into_response().await;
        tracing::info!("greet rsp: {:?}", rsp);
    }
    Ok(())
}
