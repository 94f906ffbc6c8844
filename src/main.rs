use pushmail::ui::output;

fn main() {
    if let Err(err) = pushmail::cli::run() {
        output::error(format!("{:#}", err));
        std::process::exit(1);
    }
}
