fn main() -> miette::Result<()> {
    ping::start_ping()
}
