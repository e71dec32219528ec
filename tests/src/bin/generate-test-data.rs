const NUM_COMMENTS: usize = 100;

fn main() {
    let thread = tests::gen_thread(&mut rand::thread_rng(), NUM_COMMENTS);
    match serde_json::to_string_pretty(&thread) {
        Ok(json) => println!("{json}"),
        Err(err) => {
            eprintln!("failed serializing comments: {err}");
            std::process::exit(1);
        }
    }
}
