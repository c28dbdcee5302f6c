#[cfg(feature = "blocking")]
use saltview::{BlockingSaltView, DropDownMenu, JobPage};

#[cfg(not(feature = "blocking"))]
fn main() {
    eprintln!("This example requires `--features blocking`.");
}

#[cfg(feature = "blocking")]
fn main() {
    let Some(jid) = std::env::args().nth(1) else {
        eprintln!("usage: blocking_show_job <jid>");
        std::process::exit(2);
    };

    let view = match BlockingSaltView::connect_cli() {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{e:?}");
            std::process::exit(1);
        }
    };

    let mut page = JobPage::new();
    let mut menu = DropDownMenu::new();
    if let Err(e) = view.jobs().open(&jid, &mut page, &mut menu) {
        eprintln!("{e:?}");
        std::process::exit(1);
    }

    print!("{page}");
}
