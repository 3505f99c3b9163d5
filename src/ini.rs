//! INI-like configuration documents, as read by wg-quick
//!
//! A document is an ordered list of sections. Each `[Name]` header opens a new
//! section, so repeated headers such as `[Peer]` produce independent sections
//! that share a name: [`ConfigFile::get_section`] returns the first of them,
//! [`ConfigFile::sections`] yields all of them. Keys seen before any header go
//! to a leading `DEFAULT` section.
use crate::encryption::{Key, PresharedKey};
use crate::error::{Error, Result};
use crate::network::NetSlice;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::fmt;
use std::fs;
use std::io::Write;
use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Strings which start a comment line
pub const COMMENT_PREFIXES: [&str; 3] = ["#", ";", "//"];

/// Name of the section holding keys found before any header
pub const DEFAULT_SECTION: &str = "DEFAULT";

fn check_key(key: &str) -> Result<()> {
    match key.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        Some(found) => Err(Error::InvalidSectionKey {
            key: key.to_string(),
            found,
        }),
        None if key.is_empty() => Err(Error::InvalidSectionKey {
            key: String::new(),
            found: '=',
        }),
        None => Ok(()),
    }
}

/// A named block of `key = value` pairs, such as `[Interface]` or `[Peer]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        Section {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Define a key/value pair. An existing key keeps its position.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        check_key(key)?;
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Raw value of a key
    pub fn get(&self, key: &str) -> Result<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .ok_or_else(|| Error::MissingKey {
                section: self.name.clone(),
                key: key.to_string(),
            })
    }

    pub fn get_int<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr<Err = std::num::ParseIntError>,
    {
        let value = self.get(key)?;
        value.parse().map_err(|source| Error::InvalidInteger {
            key: key.to_string(),
            value: value.to_string(),
            source,
        })
    }

    pub fn get_bytes_from_base64(&self, key: &str) -> Result<Vec<u8>> {
        Ok(BASE64.decode(self.get(key)?)?)
    }

    /// Decode a 32-byte key from a base64 value
    pub fn get_key_from_base64(&self, key: &str) -> Result<Key> {
        Key::from_bytes(&self.get_bytes_from_base64(key)?)
    }

    pub fn get_psk_from_base64(&self, key: &str) -> Result<PresharedKey> {
        let mut psk = PresharedKey::zero();
        psk.update_from_bytes(&self.get_bytes_from_base64(key)?)?;
        Ok(psk)
    }

    /// Comma separated list of bare IP addresses
    pub fn get_ip_array(&self, key: &str) -> Result<Vec<IpAddr>> {
        parse_ip_list(self.get(key)?)
    }

    /// Comma separated list of "address/prefix" networks
    pub fn get_net_slice(&self, key: &str) -> Result<NetSlice> {
        self.get(key)?.parse()
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}]", self.name)?;
        for (key, value) in &self.entries {
            writeln!(f, "{} = {}", key, value)?;
        }
        Ok(())
    }
}

/// Parse "ip, ip, ..." into addresses
pub fn parse_ip_list(value: &str) -> Result<Vec<IpAddr>> {
    value
        .split(',')
        .map(|v| {
            let v = v.trim();
            v.parse::<IpAddr>().map_err(|source| Error::InvalidIp {
                value: v.to_string(),
                source,
            })
        })
        .collect()
}

/// Render addresses as "ip, ip, ..."
pub fn format_ip_list(ips: &[IpAddr]) -> String {
    ips.iter().map(|ip| ip.to_string()).collect::<Vec<_>>().join(", ")
}

fn is_comment(line: &str) -> bool {
    COMMENT_PREFIXES.iter().any(|p| line.starts_with(p))
}

/// A whole configuration file: an ordered list of sections
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    sections: Vec<Section>,
}

impl ConfigFile {
    pub fn new() -> Self {
        ConfigFile {
            sections: Vec::new(),
        }
    }

    /// Read and parse a file from disk
    pub fn parse(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        debug!("Parsing {}", path.display());
        Self::parse_str(&content)
    }

    pub fn parse_str(content: &str) -> Result<Self> {
        let mut file = ConfigFile::new();
        file.add_section(DEFAULT_SECTION);
        let mut current = 0;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || is_comment(line) {
                continue;
            }
            if let Some(rest) = line.strip_prefix('[') {
                if let Some(end) = rest.find(']') {
                    file.add_section(&rest[..end]);
                    current = file.sections.len() - 1;
                    continue;
                }
            }
            match line.find('=') {
                Some(index) if index > 0 => {
                    let key = line[..index].trim();
                    let value = line[index + 1..].trim();
                    file.sections[current].set(key, value)?;
                }
                _ => debug!("Ignoring line without key: {}", line),
            }
        }
        Ok(file)
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.sections.iter().any(|s| s.name == name)
    }

    /// Append a new, empty section and return it
    pub fn add_section(&mut self, name: &str) -> &mut Section {
        self.sections.push(Section::new(name));
        let last = self.sections.len() - 1;
        &mut self.sections[last]
    }

    pub fn push_section(&mut self, section: Section) {
        self.sections.push(section);
    }

    /// First section with the given name
    pub fn get_section(&self, name: &str) -> Result<&Section> {
        self.sections
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| Error::MissingSection(name.to_string()))
    }

    pub fn get_section_mut(&mut self, name: &str) -> Result<&mut Section> {
        self.sections
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| Error::MissingSection(name.to_string()))
    }

    /// Remove the first section with the given name
    pub fn remove_section(&mut self, name: &str) -> Option<Section> {
        let index = self.sections.iter().position(|s| s.name == name)?;
        Some(self.sections.remove(index))
    }

    /// Write the document to `path`, readable by the owner only
    pub fn save(&self, path: &Path) -> Result<()> {
        write_private_file(path, self.to_string().as_bytes())?;
        debug!("Saved {}", path.display());
        Ok(())
    }
}

impl fmt::Display for ConfigFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rest = self.sections.as_slice();
        if let Some((first, tail)) = rest.split_first() {
            if first.name == DEFAULT_SECTION {
                if !first.is_empty() {
                    for (key, value) in first.iter() {
                        writeln!(f, "{} = {}", key, value)?;
                    }
                    writeln!(f)?;
                }
                rest = tail;
            }
        }
        for section in rest {
            write!(f, "{}", section)?;
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Create or truncate a file with mode 0600 on Unix
pub(crate) fn write_private_file(path: &Path, contents: &[u8]) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path).map_err(|e| Error::io(path, e))?;
    file.write_all(contents).map_err(|e| Error::io(path, e))?;
    restrict_permissions(path)
}

/// Restrict an existing file to its owner (no-op off Unix)
pub(crate) fn restrict_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| Error::io(path, e))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVER_CONF: &str = "\
# server
[Interface]
Address = 10.0.10.1/24
PrivateKey = wDx8ruBJgk2ZmDwgHkZfnoaSdfCgXUb4MwJ87psOJGE=
ListenPort = 12000

; first client
[Peer]
PublicKey = IYIgnBITiOdCJUyg/c0jpPi0+OWVhcWw/CS5FIpG024=
AllowedIPs = 10.0.10.2/32

// second client
[Peer]
PublicKey = IYIgnBITiOdCJUyg/c0jpPi0+OWVhcWw/CS5FIpG024=
AllowedIPs = 10.0.10.3/32
";

    #[test]
    fn test_check_key() {
        for key in ["alert", "y3s", "Why_n0t", "0x_AZZ9"] {
            assert!(check_key(key).is_ok(), "{} should be accepted", key);
        }
        for key in ["no-key", "why not", "Y€S", "#", "'", ""] {
            assert!(check_key(key).is_err(), "{} should be rejected", key);
        }
    }

    #[test]
    fn test_section_keys() {
        let mut s = Section::new("test");
        assert_eq!(s.name(), "test");
        s.set("kkey", "###").unwrap();
        assert!(s.has_key("kkey"));
        assert_eq!(s.get("kkey").unwrap(), "###");
        assert!(!s.has_key("kkey-unknown"));
        assert!(matches!(s.get("other"), Err(Error::MissingKey { .. })));

        s.set("kkey", "overwritten").unwrap();
        assert_eq!(s.len(), 1);
        assert_eq!(s.get("kkey").unwrap(), "overwritten");
        assert_eq!(s.remove("kkey").as_deref(), Some("overwritten"));
        assert!(s.is_empty());
    }

    #[test]
    fn test_get_int() {
        let mut s = Section::new("integerSection");
        s.set("integer", "17").unwrap();
        assert_eq!(s.get_int::<i64>("integer").unwrap(), 17);
        s.set("integer", "-z").unwrap();
        assert!(s.get_int::<i64>("integer").is_err());
        s.set("ListenPort", "3.4").unwrap();
        assert!(matches!(
            s.get_int::<u16>("ListenPort"),
            Err(Error::InvalidInteger { .. })
        ));
    }

    #[test]
    fn test_get_bytes_from_base64() {
        let mut s = Section::new("bytesTest");
        s.set("bytes", "YmFzZTY0").unwrap();
        assert_eq!(s.get_bytes_from_base64("bytes").unwrap(), b"base64");
        s.set("bytes", "YmFzZTY01").unwrap();
        assert!(s.get_bytes_from_base64("bytes").is_err());
        s.set("bytes", "YmFzZTY0").unwrap();
        assert!(matches!(
            s.get_key_from_base64("bytes"),
            Err(Error::KeyLength { got: 6, .. })
        ));
    }

    #[test]
    fn test_get_ip_array_and_net_slice() {
        let mut s = Section::new("net");
        s.set("DNS", "127.0.0.100, 10.10.10.10, ::1").unwrap();
        let ips = s.get_ip_array("DNS").unwrap();
        assert_eq!(format_ip_list(&ips), "127.0.0.100, 10.10.10.10, ::1");
        s.set("DNS", "1.1.1.1, not-an-ip").unwrap();
        assert!(matches!(s.get_ip_array("DNS"), Err(Error::InvalidIp { .. })));

        s.set("Address", "192.168.0.-1").unwrap();
        assert!(matches!(
            s.get_net_slice("Address"),
            Err(Error::InvalidNetwork { .. })
        ));
    }

    #[test]
    fn test_parse_repeated_sections() {
        let file = ConfigFile::parse_str(SERVER_CONF).unwrap();
        let names: Vec<&str> = file.sections().iter().map(|s| s.name()).collect();
        assert_eq!(names, ["DEFAULT", "Interface", "Peer", "Peer"]);

        // lookup returns the first match, iteration sees both
        let first = file.get_section("Peer").unwrap();
        assert_eq!(first.get("AllowedIPs").unwrap(), "10.0.10.2/32");
        assert!(file.has_section("Interface"));
        assert!(matches!(file.get_section("Nope"), Err(Error::MissingSection(_))));
    }

    #[test]
    fn test_parse_rejects_invalid_key() {
        assert!(matches!(
            ConfigFile::parse_str("[Interface]\nPrivate-Key = abc\n"),
            Err(Error::InvalidSectionKey { found: '-', .. })
        ));
    }

    #[test]
    fn test_parse_ignores_noise() {
        let file = ConfigFile::parse_str("orphan line\n  key = value  \n[A]\n= nokey\n").unwrap();
        let default = file.get_section(DEFAULT_SECTION).unwrap();
        assert_eq!(default.get("key").unwrap(), "value");
        assert!(file.get_section("A").unwrap().is_empty());
    }

    #[test]
    fn test_serialize_is_stable() {
        let file = ConfigFile::parse_str(SERVER_CONF).unwrap();
        let text = file.to_string();
        assert!(text.starts_with("[Interface]\nAddress = 10.0.10.1/24\n"));
        assert_eq!(text.matches("[Peer]").count(), 2);
        assert!(text.ends_with("AllowedIPs = 10.0.10.3/32\n\n"));

        let again = ConfigFile::parse_str(&text).unwrap();
        assert_eq!(again.to_string(), text);
    }

    #[test]
    fn test_serialize_default_section() {
        let file = ConfigFile::parse_str("top = 1\n[S]\nk = v\n").unwrap();
        assert_eq!(file.to_string(), "top = 1\n\n[S]\nk = v\n\n");
    }

    #[test]
    fn test_remove_section() {
        let mut file = ConfigFile::parse_str(SERVER_CONF).unwrap();
        let removed = file.remove_section("Peer").unwrap();
        assert_eq!(removed.get("AllowedIPs").unwrap(), "10.0.10.2/32");
        assert_eq!(
            file.get_section("Peer").unwrap().get("AllowedIPs").unwrap(),
            "10.0.10.3/32"
        );
    }

    #[test]
    fn test_save_and_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wg0.conf");
        let file = ConfigFile::parse_str(SERVER_CONF).unwrap();
        file.save(&path).unwrap();

        let loaded = ConfigFile::parse(&path).unwrap();
        assert_eq!(loaded, file);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_parse_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ConfigFile::parse(&dir.path().join("missing.conf")),
            Err(Error::Io { .. })
        ));
    }
}
