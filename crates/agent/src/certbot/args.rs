use anyhow::{anyhow, Result};

/// Builds `certonly` arguments for a standalone HTTP-01 run covering every domain under the
/// primary domain's lineage. `--expand` lets certbot grow an existing lineage when the set changes.
pub(super) fn certonly_args(domains: &[String], email: &str, staging: bool) -> Vec<String> {
    let mut args = vec!["certonly".to_string()];

    if staging {
        args.push("--test-cert".to_string());
    }

    args.extend(
        [
            "--agree-tos",
            "--standalone",
            "--preferred-challenges",
            "http",
            "-n",
            "-m",
            email,
            "--expand",
        ]
        .map(ToString::to_string),
    );

    for domain in domains {
        args.push("-d".to_string());
        args.push(domain.clone());
    }

    args
}

pub(super) fn validate_certonly_args(args: &[String]) -> Result<()> {
    if args.first().map(String::as_str) != Some("certonly") {
        return Err(anyhow!("certbot arguments are not allowed: {args:?}"));
    }

    let mut has_agree_tos = false;
    let mut has_standalone = false;
    let mut has_http_challenge = false;
    let mut has_non_interactive = false;
    let mut has_expand = false;
    let mut email: Option<&str> = None;
    let mut domains: Vec<&str> = Vec::new();

    let mut i = 1_usize;
    while i < args.len() {
        match args[i].as_str() {
            "--test-cert" => {
                i += 1;
            }
            "--agree-tos" => {
                has_agree_tos = true;
                i += 1;
            }
            "--standalone" => {
                has_standalone = true;
                i += 1;
            }
            "--preferred-challenges" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| anyhow!("certbot --preferred-challenges requires a value"))?;
                if value.as_str() != "http" {
                    return Err(anyhow!("certbot challenge is not allowed: {value}"));
                }
                has_http_challenge = true;
                i += 2;
            }
            "-n" => {
                has_non_interactive = true;
                i += 1;
            }
            "-m" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| anyhow!("certbot -m requires a value"))?;
                email = Some(value.as_str());
                i += 2;
            }
            "--expand" => {
                has_expand = true;
                i += 1;
            }
            "-d" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| anyhow!("certbot -d requires a value"))?;
                domains.push(value.as_str());
                i += 2;
            }
            other => {
                return Err(anyhow!("certbot argument is not allowed: {other}"));
            }
        }
    }

    if !has_agree_tos
        || !has_standalone
        || !has_http_challenge
        || !has_non_interactive
        || !has_expand
    {
        return Err(anyhow!(
            "certbot certonly args missing required flags: {args:?}"
        ));
    }

    let Some(email) = email else {
        return Err(anyhow!("certbot certonly must include -m"));
    };

    if email.trim().is_empty() || email.contains(' ') || !email.contains('@') {
        return Err(anyhow!("certbot email is not allowed"));
    }

    if domains.is_empty() {
        return Err(anyhow!("certbot certonly must include -d"));
    }

    for domain in domains {
        if domain.trim().is_empty()
            || !domain.contains('.')
            || !domain
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '.' || ch == '-')
        {
            return Err(anyhow!("certbot domain is not allowed: {domain}"));
        }
    }

    Ok(())
}
