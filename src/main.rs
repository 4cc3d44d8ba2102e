fn main() -> Result<(), Box<dyn std::error::Error>> {
    threadchat::cli::main()
}
