use saltview::{DropDownMenu, JobPage, SaltView};

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
    let Some(jid) = std::env::args().nth(1) else {
        eprintln!("usage: show_job <jid>");
        std::process::exit(2);
    };

    let view = SaltView::connect_cli().await?;

    let mut page = JobPage::new();
    let mut menu = DropDownMenu::new();
    view.jobs().open(&jid, &mut page, &mut menu).await?;

    print!("{page}");
    for item in menu.visible_items() {
        println!("  [menu] {}", item.label);
    }
    Ok(())
}
