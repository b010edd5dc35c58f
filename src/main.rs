use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    verum::cli::main()
}
