use crate::utils::print_header;
use nnnsim_core::PolicyRegistry;

pub fn list_policies() {
    print_header("Replacement policies");
    for name in PolicyRegistry::new().names() {
        println!("{}", name);
    }
}
