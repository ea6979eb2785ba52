use std::process::ExitCode;

fn main() -> ExitCode {
    match utxo_index_node::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
