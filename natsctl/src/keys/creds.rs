//! Decorated `.creds` file formatting, matching the layout `nats-server`
//! (and every official NATS client) expects for `-creds` flags.

use crate::error::Result;

pub fn format_creds(jwt: &str, seed: &str) -> Result<String> {
    Ok(format!(
        "-----BEGIN NATS USER JWT-----\n{}\n------END NATS USER JWT------\n\n\
         ************************* IMPORTANT *************************\n\
         NKEY Seed printed below can be used to sign and prove identity.\n\
         NKEYs are sensitive and should be treated as secrets.\n\n\
         -----BEGIN USER NKEY SEED-----\n{}\n------END USER NKEY SEED------\n\n\
         *************************************************************\n",
        jwt, seed
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creds_file_carries_both_blocks() {
        let out = format_creds("header.claims.sig", "SUAFAKESEED").unwrap();
        assert!(out.contains("BEGIN NATS USER JWT"));
        assert!(out.contains("header.claims.sig"));
        assert!(out.contains("BEGIN USER NKEY SEED"));
        assert!(out.contains("SUAFAKESEED"));
    }
}
