fn main() -> Result<(), Box<dyn std::error::Error>> {
    creditchat::cli::main()
}
