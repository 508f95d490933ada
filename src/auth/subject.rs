/// An X.509 distinguished name, kept as ordered attribute pairs.
///
/// The harness never parses certificates; subjects arrive as strings like
/// `C=US,ST=New York,L=New York City,O=ShardKit,OU=Kernel,CN=server`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X509Subject {
    components: Vec<(String, String)>,
}

impl X509Subject {
    pub fn parse(subject: &str) -> Self {
        let components = subject
            .split(',')
            .filter_map(|part| {
                part.split_once('=')
                    .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            })
            .collect();
        Self { components }
    }

    pub fn common_name(&self) -> Option<&str> {
        self.components
            .iter()
            .find(|(k, _)| k == "CN")
            .map(|(_, v)| v.as_str())
    }

    fn without_cn(&self) -> Vec<&(String, String)> {
        self.components.iter().filter(|(k, _)| k != "CN").collect()
    }

    /// Whether `other` carries the same organizational identity, i.e. the
    /// subjects are equal apart from (at most) the CN attribute. A subject
    /// matching the server's identity this way is reserved for inter-node
    /// communication and may never name a user.
    pub fn same_organizational_identity(
        &self,
        other: &X509Subject,
    ) -> bool {
        self.without_cn() == other.without_cn()
    }
}
