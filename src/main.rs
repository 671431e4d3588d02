use rusty_scope::app::{Args, RustyScopeApp};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse(std::env::args().skip(1))?;
    let mut app = RustyScopeApp::from_args(&args)?;
    app.run(&args)
}
