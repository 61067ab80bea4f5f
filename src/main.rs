use profile_supervisor::{app, clean_logger};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let res = app::run().await;
    clean_logger();
    match res {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(1);
        }
    }
}
