fn main() {
    if let Err(err) = category_importer::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
