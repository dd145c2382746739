fn main() {
    match autopilot_demo::chained_app() {
        Ok(app) => app.main(),
        Err(err) => {
            eprintln!("invalid autopilot definition: {err}");
            std::process::exit(2);
        }
    }
}
