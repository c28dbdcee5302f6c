use saltview::{PillarsPage, SaltView};

#[cfg(feature = "rt-async-io")]
fn main() {
    if let Err(e) = smol::block_on(run()) {
        eprintln!("{e:?}");
        std::process::exit(1);
    }
}

#[cfg(feature = "rt-tokio")]
fn main() {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("init tokio runtime failed: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(run()) {
        eprintln!("{e:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), saltview::Error> {
    let view = connect().await?;

    let caps = view.capabilities().await;
    if !caps.can_read_keys {
        eprintln!("key list is not readable with these credentials");
    }

    let mut page = PillarsPage::new();
    view.pillars().open(&mut page).await;
    print!("{page}");
    Ok(())
}

#[cfg(feature = "backend-http")]
async fn connect() -> Result<SaltView, saltview::Error> {
    SaltView::connect_http(saltview::HttpCredentials::from_env()?).await
}

#[cfg(not(feature = "backend-http"))]
async fn connect() -> Result<SaltView, saltview::Error> {
    SaltView::connect_cli().await
}
