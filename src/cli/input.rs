//! Interactive passphrase prompts

use zeroize::Zeroizing;

use crate::cli::commands::CliResult;

const MAX_CONFIRM_ATTEMPTS: u8 = 2;

/// Read a passphrase without echo
pub fn get_passphrase(prompt: &str) -> CliResult<Zeroizing<String>> {
    let passphrase = Zeroizing::new(rpassword::prompt_password(prompt)?);
    Ok(Zeroizing::new(passphrase.trim().to_string()))
}

/// Ask for a new passphrase and have it repeated
pub fn request_new_passphrase() -> CliResult<Zeroizing<String>> {
    loop {
        let passphrase = get_passphrase("Enter passphrase: ")?;
        if passphrase.is_empty() {
            println!("Passphrase is required.");
            continue;
        }

        for _ in 0..MAX_CONFIRM_ATTEMPTS {
            if *get_passphrase("Repeat passphrase: ")? == *passphrase {
                return Ok(passphrase);
            }
            println!("Passphrases do not match.");
        }
    }
}
