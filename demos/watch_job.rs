use std::time::Duration;

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
    let view = SaltView::connect_cli().await?;

    // Start a job, then follow it until every minion is done.
    let command = saltview::Command::new(saltview::TargetType::Glob, "*", "test.sleep 5");
    let Some(jid) = view.jobs().run(&command).await? else {
        eprintln!("no minion matched the target");
        return Ok(());
    };
    println!("started {jid}");

    let mut page = JobPage::new();
    let mut menu = DropDownMenu::new();
    let Some(mut handle) = view.jobs().open(&jid, &mut page, &mut menu).await? else {
        print!("{page}");
        return Ok(());
    };

    let status = view
        .jobs()
        .watch(&mut handle, &mut page, &mut menu, Duration::from_secs(60))
        .await?;
    println!("{status}");
    print!("{page}");
    Ok(())
}
